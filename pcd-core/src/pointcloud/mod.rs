pub mod classification;
pub mod feature;
pub mod point;
