//! External endpoint probing
//!
//! [`HttpProber`] fetches a URL outside the browser session and hands back
//! status, content type and body without judging them. [`asset_links`] judges
//! a digital-asset-links descriptor against the expected package.

pub mod asset_links;
pub mod errors;
pub mod prober;

pub use asset_links::{assert_asset_links, AssetLinksReport, AssetStatement, AssetTarget};
pub use errors::*;
pub use prober::*;
