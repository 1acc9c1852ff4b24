pub mod catalogs;
pub mod constants;
pub mod crossmatch;
pub mod fits;
pub mod footprints;
pub mod healpix;
pub mod output;
pub mod ref_frames;
pub mod skymatch;
pub mod skymatch_errors;
