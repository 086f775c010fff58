pub mod prewarm;
