pub mod ai;
pub mod pi;
pub mod pif;
pub mod ri;
pub mod si;
pub mod vi;
