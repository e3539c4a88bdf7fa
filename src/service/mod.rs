pub mod bookmarks;
pub mod directory_cache;
pub mod identity;
pub mod merge;
pub mod merge_actor;
pub mod restaurants;
pub mod sessions;
pub mod users;

pub use bookmarks::BookmarkLedger;
pub use directory_cache::{DirectoryCache, PeopleDirectory};
pub use identity::{CookieAction, IdentityResolver, RequestContext, Resolution, SessionSource};
pub use merge::{MergeOutcome, MergePlan};
pub use merge_actor::MergeHandle;
pub use restaurants::RestaurantProvider;
pub use sessions::{Session, SessionStore};
pub use users::UserDirectory;
