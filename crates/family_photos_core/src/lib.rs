pub mod domain;
pub mod ports;
pub mod query;

pub use domain::{
    Album, Comment, Location, NewPhoto, NewUser, Photo, PhotoDetail, PhotoUpdate,
    Reaction, RecentActivity, Stats, TagCount, Target, User,
};
pub use ports::{DatabaseService, MagicLinkMailer, MediaStore, PortError, PortResult};
pub use query::{AlbumQuery, AlbumSort, Page, Pagination, PhotoPredicate, PhotoQuery, PhotoSort, SearchQuery};
