pub mod identity_grouper;
