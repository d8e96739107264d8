use microtrain::{
  config::RunConfig,
  data::{ Dataset, DataLoader, TabularDataset },
  model::{ Mlp, Stage },
  run,
  synthetic::make_classification,
  tracking::MemoryTracker,
};
use rand::{SeedableRng, rngs::StdRng};


fn config(dir: &std::path::Path, epochs: usize) -> RunConfig {
  let mut config = RunConfig::default();
  config.train.epochs = epochs;
  config.train.seed = Some(42);
  config.model_path = dir.join("artifacts").join("test_model.nn");
  config
}

#[test]
fn three_epochs() {
  let dir = tempfile::tempdir().unwrap();
  let config = config(dir.path(), 3);
  let tracker = MemoryTracker::new();
  let summary = run::train(&config, tracker.clone()).unwrap();

  assert_eq!(summary.epochs, 3);
  let accuracy = tracker.series("evaluation/accuracy");
  let loss = tracker.series("evaluation/loss");
  assert_eq!(accuracy.iter().map(|(step, _)| *step ).collect::<Vec<_>>(), vec![1, 2, 3]);
  assert_eq!(loss.iter().map(|(step, _)| *step ).collect::<Vec<_>>(), vec![1, 2, 3]);
  assert!(accuracy.iter().all(|(_, value)| (0.0..=1.0).contains(value) ));
  assert!(loss.iter().all(|(_, value)| value.is_finite() && *value > 0.0 ));
  assert_eq!(tracker.series("lr/group_0").len(), 3);
  assert_eq!(tracker.closes(), 1);

  let size = std::fs::metadata(&summary.model_path).unwrap().len();
  assert!(size > 0);
}

#[test]
fn saved_model_reproduces_evaluation() {
  let dir = tempfile::tempdir().unwrap();
  let config = config(dir.path(), 2);
  let summary = run::train(&config, MemoryTracker::new()).unwrap();

  let model = Mlp::<f32>::load(&summary.model_path).unwrap();
  assert_eq!(model.layers(), &[(20, 100), (100, 60), (60, 2)]);
  assert!(matches!(model.stages()[0], Stage::Dropout(_)));
  assert_eq!(model.num_parameters(), 8282 + 2 * 100 + 2 * 60);

  // Regenerate the same dataset from the seed and score the restored model on it
  let mut rng = StdRng::seed_from_u64(42);
  let data: TabularDataset<f32> = make_classification(&config.data, &mut rng).unwrap();
  let mut loader = DataLoader::new(data, 64, false, StdRng::seed_from_u64(0)).unwrap();
  let mut correct = 0;
  for batch in loader.batches().unwrap() {
    let predicted = model.predict(&batch.inputs).unwrap();
    correct += predicted.iter().zip(&batch.labels).filter(|(p, l)| p == l ).count();
  }
  let accuracy = correct as f64 / loader.dataset().len() as f64;
  assert!((accuracy - summary.metrics["accuracy"]).abs() < 1e-9);
}
