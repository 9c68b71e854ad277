pub mod capture;
pub mod clip;
pub mod pcm;
pub mod playback;
pub mod resample;
pub mod speaker;
