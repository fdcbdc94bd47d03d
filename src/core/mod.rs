//! Core building blocks: chunking and worker pools, geometry repair/union,
//! and the four pipeline stages (dissolve, polygonize, concatenate, filter).
//! These are consumed by the high-level `api` module.
pub mod chunk;
pub mod concatenate;
pub mod dissolve;
pub mod filter;
pub mod geometry;
pub mod parallel;
pub mod params;
pub mod polygonize;
pub mod resize;
