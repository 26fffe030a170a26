//! Input data loading.

pub mod loader;

pub use loader::{
    FrameLayout, PriceUniverse, load_csv, load_price_file, load_quote_bundle, parse_quote_bundle,
    series_from_frame,
};
