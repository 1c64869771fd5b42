pub mod copy;
pub mod marker;
pub mod permissions;

pub use copy::{copy_dir_all, copy_file_with_metadata, copy_path, copy_symlink, remove_path};
pub use marker::{latest_mtime, replace_file, write_marker};
pub use permissions::{is_executable, make_executable};
