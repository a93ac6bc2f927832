pub mod anomaly_detector;
