mod engine;
mod messaging;
mod playback;
mod routing;
mod voices;
