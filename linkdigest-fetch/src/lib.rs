pub mod enricher;
pub mod error;
pub mod feed;
pub mod poster;
pub mod record;

pub use enricher::{Enricher, HttpEnricher};
pub use error::FetchError;
pub use feed::{FeedSource, HttpFeed, JsonFileFeed};
pub use poster::{LinkPost, LogPoster, Poster, WebhookPoster};
pub use record::{LinkMention, LinkRecord, ObservationBatch};
