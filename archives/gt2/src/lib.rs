pub mod ovl;
