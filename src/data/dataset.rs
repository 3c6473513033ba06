use burn::data::dataset::Dataset;

use crate::domain::example::Example;

/// In-memory examples behind burn's `Dataset` trait.
/// Every example has the same dimensionality (checked on construction).
#[derive(Debug, Clone, Default)]
pub struct ExampleDataset {
    examples: Vec<Example>,
}

impl ExampleDataset {
    /// Panics if the examples disagree on their dimensionality;
    /// loaders validate this before constructing a dataset.
    pub fn new(examples: Vec<Example>) -> Self {
        if let Some(first) = examples.first() {
            let dim = first.dim();
            assert!(
                examples.iter().all(|e| e.dim() == dim),
                "all examples must share input dimension {dim}"
            );
        }
        Self { examples }
    }

    /// Input dimensionality, 0 for an empty dataset
    pub fn input_dim(&self) -> usize {
        self.examples.first().map(Example::dim).unwrap_or(0)
    }

    pub fn examples(&self) -> &[Example] { &self.examples }
}

impl Dataset<Example> for ExampleDataset {
    fn get(&self, index: usize) -> Option<Example> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_reports_shape() {
        let ds = ExampleDataset::new(vec![
            Example::new(vec![0.0, 1.0, 1.0]),
            Example::new(vec![1.0, 0.0, 0.0]),
        ]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.input_dim(), 3);
        assert_eq!(ds.get(1).unwrap().features[0], 1.0);
        assert!(ds.get(2).is_none());
    }

    #[test]
    #[should_panic]
    fn test_mixed_dimensions_panic() {
        let _ = ExampleDataset::new(vec![Example::new(vec![0.0]), Example::new(vec![0.0, 1.0])]);
    }
}
