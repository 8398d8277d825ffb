pub mod courier;
pub mod geocode;
pub mod product;
pub mod route;
pub mod trip;
