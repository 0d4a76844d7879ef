pub mod capture {
    pub mod capture_controller;
    pub mod capture_logger;
    pub mod capture_session;
}

pub mod conversion {
    pub mod domain {
        pub mod tone_map;
    }
    pub mod infrastructure;
}

pub mod encoding {
    pub mod domain {
        pub mod encoder_session;
        pub mod remuxer;
    }
    pub mod infrastructure;
}

pub mod shared {
    pub mod capture_config;
    pub mod constants;
    pub mod error;
    pub mod frame_pattern;
    pub mod frame_size;
    pub mod hdr_frame;
    pub mod pixel_packing;
}
