pub mod fs;
pub mod list_hash;
pub mod nom;
