pub mod eta;
pub mod gps_path;
pub mod password;
pub mod seed;
pub mod simulator;
