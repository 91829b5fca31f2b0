mod cat;
mod inspect;
mod ls;
mod stream;

pub use cat::run_cat;
pub use inspect::run_inspect;
pub use ls::run_ls;
pub use stream::run_stream;
