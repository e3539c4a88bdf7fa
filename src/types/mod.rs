pub mod account;
pub mod bookmark;
pub mod paging;
pub mod person;
pub mod restaurant;

pub use account::{
    Account, AccountJson, ExternalAccount, LocalAccount, RemoteProfile, is_local_identity,
    local_identity,
};
pub use bookmark::{Bookmark, BookmarkJson, BookmarkKey, DEFAULT_NOTE};
pub use paging::Page;
pub use person::{PeopleBatch, PeopleCollection, Person};
pub use restaurant::{GeoPoint, Restaurant, RestaurantJson};
