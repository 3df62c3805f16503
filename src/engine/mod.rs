pub mod advantage;
pub mod backtest;
pub mod blend;
pub mod calibration;
pub mod combos;
pub mod grading;
pub mod kelly;
pub mod odds;
pub mod picks;
pub mod pipeline;
pub mod tuner;
pub mod win_probability;
