pub mod de;
pub mod export;
pub mod time;
