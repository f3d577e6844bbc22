pub mod conversations;
pub mod router;
pub mod view;
