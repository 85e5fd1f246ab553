pub mod frame;
pub mod score_contigs;
pub mod spectral;

pub use frame::FrameScorer;
pub use score_contigs::{score_contigs_parallel, score_spectral, ContigResult, FootprintSource};
pub use spectral::{SpectralCall, SpectralScorer};
