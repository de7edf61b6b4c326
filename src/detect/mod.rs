mod decoder;
pub mod labels;
mod ranker;
pub(crate) mod result;

pub use decoder::{DecoderSettings, FrameDecoder, RawBatch, SlotRejection};
pub use labels::LabelTable;
pub use ranker::{RankedFrame, Ranker, RankerSettings};
pub use result::{BoundingBox, Detection, FrameResult};
