pub mod backend;
pub mod client;
pub mod company;
pub mod controller;
pub mod domain;
pub mod export;
pub mod inputter;
pub mod model;
pub mod mutation;
pub mod ui;
pub mod view;
