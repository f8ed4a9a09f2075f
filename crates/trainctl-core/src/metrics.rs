//! Metrics series store.
//!
//! An append-only, arrival-ordered sequence of epoch events. The orchestrator
//! owns the only writer; rendering code holds cheap [`MetricsReader`] handles.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// One epoch's worth of training and validation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochEvent {
    /// Zero-based epoch number as reported by the backend.
    pub epoch: u64,
    pub training_loss: f64,
    pub validation_loss: f64,
    pub training_accuracy: f64,
    pub validation_accuracy: f64,
}

impl EpochEvent {
    /// One-based display label, e.g. `Epoch 1` for epoch 0.
    #[must_use]
    pub fn label(&self) -> String {
        format!("Epoch {}", self.epoch.saturating_add(1))
    }

    #[must_use]
    pub fn value(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::TrainingLoss => self.training_loss,
            MetricKind::ValidationLoss => self.validation_loss,
            MetricKind::TrainingAccuracy => self.training_accuracy,
            MetricKind::ValidationAccuracy => self.validation_accuracy,
        }
    }
}

/// The four plotted series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    TrainingLoss,
    ValidationLoss,
    TrainingAccuracy,
    ValidationAccuracy,
}

impl MetricKind {
    pub const ALL: [Self; 4] =
        [Self::TrainingLoss, Self::ValidationLoss, Self::TrainingAccuracy, Self::ValidationAccuracy];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TrainingLoss => "Training Loss",
            Self::ValidationLoss => "Validation Loss",
            Self::TrainingAccuracy => "Training Accuracy",
            Self::ValidationAccuracy => "Validation Accuracy",
        }
    }
}

/// Plain numeric series for a chart widget: one x label per event and one
/// y vector per metric kind, all the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub training_loss: Vec<f64>,
    pub validation_loss: Vec<f64>,
    pub training_accuracy: Vec<f64>,
    pub validation_accuracy: Vec<f64>,
}

impl ChartSeries {
    fn from_events(events: &[EpochEvent]) -> Self {
        let mut chart = Self::default();
        for event in events {
            chart.labels.push(event.label());
            chart.training_loss.push(event.training_loss);
            chart.validation_loss.push(event.validation_loss);
            chart.training_accuracy.push(event.training_accuracy);
            chart.validation_accuracy.push(event.validation_accuracy);
        }
        chart
    }

    #[must_use]
    pub fn series(&self, kind: MetricKind) -> &[f64] {
        match kind {
            MetricKind::TrainingLoss => &self.training_loss,
            MetricKind::ValidationLoss => &self.validation_loss,
            MetricKind::TrainingAccuracy => &self.training_accuracy,
            MetricKind::ValidationAccuracy => &self.validation_accuracy,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

type SharedEvents = Arc<RwLock<Vec<EpochEvent>>>;

/// Writer side of the metrics series. Not `Clone`: there is one writer.
#[derive(Debug, Default)]
pub struct MetricsSeriesStore {
    events: SharedEvents,
}

impl MetricsSeriesStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends in arrival order. Repeated epoch numbers are kept as separate entries.
    pub fn append(&mut self, event: EpochEvent) {
        self.events.write().unwrap_or_else(PoisonError::into_inner).push(event);
    }

    /// Empties the series. Only an explicit user reset calls this.
    pub fn reset(&mut self) {
        self.events.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<EpochEvent> {
        read_events(&self.events).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read_events(&self.events).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A read-only handle observing this store.
    #[must_use]
    pub fn reader(&self) -> MetricsReader {
        MetricsReader { events: Arc::clone(&self.events) }
    }
}

/// Read-only view of a [`MetricsSeriesStore`].
#[derive(Debug, Clone)]
pub struct MetricsReader {
    events: SharedEvents,
}

impl MetricsReader {
    #[must_use]
    pub fn snapshot(&self) -> Vec<EpochEvent> {
        read_events(&self.events).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read_events(&self.events).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn latest(&self) -> Option<EpochEvent> {
        read_events(&self.events).last().copied()
    }

    #[must_use]
    pub fn chart(&self) -> ChartSeries {
        ChartSeries::from_events(&read_events(&self.events))
    }
}

fn read_events(events: &SharedEvents) -> std::sync::RwLockReadGuard<'_, Vec<EpochEvent>> {
    events.read().unwrap_or_else(PoisonError::into_inner)
}
