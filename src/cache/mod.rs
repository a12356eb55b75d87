pub mod poster_store;

mod macros;

pub use poster_store::{DiskPosterStore, MemoryPosterStore, PosterKey, PosterStore, PosterWriterHandle};
