pub mod pixel_converter;
