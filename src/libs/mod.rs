pub mod decay;
pub mod error;
pub mod io;
pub mod matrix;
pub mod pipeline;
pub mod profile;
pub mod record;
pub mod scan;
pub mod sizes;
pub mod sort;
pub mod source;
