mod analysis;
mod chain;
mod motion;
mod placement;
mod selection;
