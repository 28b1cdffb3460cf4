#[cfg(feature = "ngspice-compare")]
mod regression;

#[cfg(feature = "ngspice-compare")]
regression::regression_tests!(
    single_pixel_gaas,
    finger_grid,
    finger_grid_toggles,
    finger_grid_adaptive,
);
