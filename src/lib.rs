pub mod compose;
pub mod logging;
pub mod ordering;
pub mod storage;
pub mod visibility;
pub mod web;
