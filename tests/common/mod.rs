#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use roimill::config::Config;
use roimill::roi::{write_dataset, Dataset};
use roimill::stages::{PyramidOperation, SlidingWindow};

/// Builds a `width x height` dataset from a sample function.
pub fn grid(width: usize, height: usize, sample: impl Fn(usize, usize) -> f64) -> Dataset {
    let rows = (0..height)
        .map(|y| (0..width).map(|x| sample(x, y)).collect())
        .collect();
    Dataset::from_rows(rows).expect("rectangular grid")
}

pub fn write_grid(path: &Path, dataset: &Dataset) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    write_dataset(path, dataset).expect("write dataset file");
}

pub fn write_bundle(dir: &Path, statistic: &str, threshold: f64) -> PathBuf {
    let path = dir.join("bundle.yaml");
    fs::write(&path, format!("statistic: {statistic}\nthreshold: {threshold}\n")).expect("write bundle");
    path
}

pub fn write_config(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("roimill.yaml");
    fs::write(&path, yaml).expect("write config");
    path
}

/// Number of windows the mill cuts out of `dataset` under `config`.
pub fn window_count(config: &Config, dataset: &Dataset) -> usize {
    let pyramid = PyramidOperation::new(config.pyramid.scalefactor, config.pyramid.windowsize);
    let slider = SlidingWindow::new(
        config.slider.step,
        config.slider.window.width,
        config.slider.window.height,
    );
    pyramid
        .levels(dataset)
        .iter()
        .map(|(_, level)| slider.windows(level).len())
        .sum()
}
