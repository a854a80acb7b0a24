pub mod filesystem;
pub mod ftp;
pub mod memory;
pub mod s3;
pub mod webdav;
