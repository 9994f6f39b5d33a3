//! Local image storage and the R2 object backend.

mod assets;
mod compress;
mod r2;

pub use assets::AssetStore;
pub use compress::{compress_jpeg, CompressedImage, DEFAULT_QUALITY, MAX_EDGE};
pub use r2::{parse_config as parse_r2_config, R2Config, R2Storage};
