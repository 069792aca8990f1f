//! # Transform Aggregator - Robust Correspondence Aggregation
//!
//! `transform_aggregator` turns a set of weighted point correspondences (a
//! source point, its matched target, a confidence weight and an optional
//! local error) into a single global transform: a translation, a rigid
//! motion or a full affine map. Outliers are handled with an M-estimator
//! solved by iteratively reweighted least squares, and the weighted centroid
//! of the sources (the estimation barycenter) is reported alongside the
//! transform.
//!
//! ## Quick Start
//!
//! The easiest way in is through the matrix API:
//!
//! ```rust
//! use transform_aggregator::estimate_affine;
//! use nalgebra::DMatrix;
//!
//! let sources = DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
//! let targets = DMatrix::from_row_slice(4, 2, &[1.0, 1.0, 3.0, 1.0, 3.0, 2.0, 1.0, 2.0]);
//!
//! let out = estimate_affine::<2>(&sources, &targets, None, None).unwrap();
//! assert!(out.report.converged());
//! println!("linear part {}", out.estimate.linear());
//! ```
//!
//! ## Aggregators
//!
//! For incremental use, build an aggregator, feed it correspondences and
//! call [`update`](core::TransformAggregator::update):
//!
//! ```rust
//! use nalgebra::{Rotation2, Vector2};
//! use transform_aggregator::{
//!     AggregatorSettings, Correspondence, MEstimateAggregator, ModelClass, TransformAggregator,
//! };
//!
//! let rotation = Rotation2::new(0.3);
//! let settings = AggregatorSettings::default().with_output_model(ModelClass::Rigid);
//! let mut aggregator = MEstimateAggregator::<2>::new(settings);
//! for i in 0..10 {
//!     let p = Vector2::new(i as f64, (i * i % 7) as f64);
//!     aggregator
//!         .add_correspondence(Correspondence::weighted(p, rotation * p, 1.0))
//!         .unwrap();
//! }
//! aggregator.update().unwrap();
//! let angle = aggregator.estimate().unwrap().rotation_angle();
//! assert!((angle - 0.3).abs() < 1e-9);
//! ```
//!
//! ## Modules
//!
//! - **[`api`](api)**: Matrix-based helpers for one-shot estimation
//! - **[`aggregators`](aggregators)**: M-estimator, least-squares and trimmed aggregators
//! - **[`core`](core)**: Core traits and report types
//! - **[`convergence`](convergence)**: Stopping and weight-collapse rules
//! - **[`estimators`](estimators)**: Closed-form weighted solvers per model class
//! - **[`scoring`](scoring)**: Residuals, robust weighting functions and costs
//! - **[`models`](models)**: Transform model types
//! - **[`settings`](settings)**: Aggregation configuration
//! - **[`synthetic`](synthetic)**: Seeded synthetic data generators

pub mod aggregators;
pub mod api;
pub mod convergence;
pub mod core;
pub mod error;
pub mod estimators;
pub mod models;
pub mod scoring;
pub mod settings;
pub mod synthetic;
pub mod types;
pub mod utils;

// Re-export high-level API
pub use api::{
    estimate_affine, estimate_rigid, estimate_transform, estimate_translation,
    AggregationOutput,
};

// Re-export core traits and aggregators for easy access
pub use aggregators::{LeastSquaresAggregator, LtsAggregator, MEstimateAggregator};
pub use crate::core::{
    AggregationReport, AggregationStatus, Estimator, IterationRecord, NonConvergence,
    TransformAggregator,
};

pub use error::{AggregationError, AggregationResult};
pub use models::{ModelClass, TransformEstimate};
pub use scoring::{RobustWeighting, ScaleEstimator};
pub use settings::AggregatorSettings;
pub use types::{Correspondence, CorrespondenceSet, Point};
