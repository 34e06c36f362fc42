pub mod classifier;
pub mod intersect;
pub mod skeleton_model;

pub use classifier::{ScreenScore, SkeletonMerge, classify, classify_fingerprint, merge_samples, rank};
pub use intersect::intersect;
pub use skeleton_model::{Fingerprint, SkeletonError, SkeletonNode};
