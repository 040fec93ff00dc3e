mod disk;
mod hash;
mod memory_fs;
mod transfer;
