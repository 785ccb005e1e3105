#![forbid(unsafe_code)]

pub mod compositor;
pub mod encode_mp4;
pub mod error;
pub mod export;
pub mod fetch;
pub mod gif_decode;
pub mod model;
pub mod raster;
pub mod receipt;
pub mod scene;

pub use compositor::{BACKGROUND_FILL, CompositingState};
pub use encode_mp4::{DEFAULT_BITRATE_KBPS, EncodeConfig, Mp4Encoder, is_ffmpeg_on_path};
pub use error::{ReadreelError, ReadreelResult};
pub use export::{
    ExportOptions, ExportOutcome, ExportStage, ProgressEvent, export_social,
    export_social_with_encoder,
};
pub use fetch::{GifSource, fetch_gif_bytes};
pub use gif_decode::{DecodedGif, DisposalMode, GifFrame, MIN_FRAME_DELAY_MS, Placement, decode_gif};
pub use model::{BookRecord, ReadingStats};
pub use raster::Raster;
pub use receipt::{PngReceipt, ReceiptSource};
pub use scene::{ExportPlan, compose_scene};
