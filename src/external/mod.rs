pub mod feed_repo;
pub mod price_feed;
