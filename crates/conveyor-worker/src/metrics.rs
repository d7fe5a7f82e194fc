use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Prometheus metrics for one worker process
pub struct WorkerMetrics {
    pub registry: Registry,

    /// Attempts by resulting status and task type
    pub tasks_total: CounterVec,

    /// Handlers currently executing
    pub tasks_in_flight: IntGauge,

    /// Attempt duration by task type
    pub task_processing_duration: HistogramVec,
}

impl WorkerMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let tasks_total = CounterVec::new(
            Opts::new("conveyor_tasks_total", "Task attempts by resulting status and type"),
            &["status", "task_type"],
        )?;
        registry.register(Box::new(tasks_total.clone()))?;

        let tasks_in_flight =
            IntGauge::new("conveyor_tasks_in_flight", "Handlers currently executing")?;
        registry.register(Box::new(tasks_in_flight.clone()))?;

        let task_processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "conveyor_task_processing_duration_seconds",
                "Attempt duration in seconds",
            ),
            &["task_type"],
        )?;
        registry.register(Box::new(task_processing_duration.clone()))?;

        Ok(WorkerMetrics {
            registry,
            tasks_total,
            tasks_in_flight,
            task_processing_duration,
        })
    }

    pub fn inc_tasks(&self, status: &str, task_type: &str) {
        self.tasks_total.with_label_values(&[status, task_type]).inc();
    }

    pub fn observe_duration(&self, task_type: &str, duration_secs: f64) {
        self.task_processing_duration
            .with_label_values(&[task_type])
            .observe(duration_secs);
    }

    /// Render the registry in Prometheus text exposition format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder
            .encode(&self.registry.gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
