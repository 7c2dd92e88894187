use crate::balancer::{undersample, Smote};
use crate::config::PipelineConfig;
use crate::csv_reader::{load_frame, read_transactions, transactions_to_frame, Transaction};
use crate::encoder::OneHotVocabulary;
use crate::error::PipelineError;
use crate::forest::{ForestParams, RandomForest};
use crate::frame::{Column, Frame};
use crate::imputer::{column_mean, column_mode, ImputerStats};
use crate::metrics::{accuracy, classification_report, roc_auc};
use crate::model_selection::{stratified_folds, train_test_split, GridSearch, ParamGrid};
use crate::pipeline::run_on_frame;
use crate::scaler::ScalerStats;
use crate::sparse::FeatureMatrix;
use crate::splitter::{drop_named_columns, split_features_target, LabeledSet};

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud";

    fn write_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn transaction(i: usize, fraud: bool) -> Transaction {
        Transaction {
            step: Some(1 + (i % 7) as i64),
            kind: Some(if fraud { "TRANSFER" } else { "PAYMENT" }.to_string()),
            amount: Some(if fraud { 90_000.0 + 1_000.0 * i as f64 } else { 50.0 + 10.0 * i as f64 }),
            name_orig: Some(format!("C{}", 1000 + i)),
            old_balance_orig: Some(if fraud { 95_000.0 } else { 500.0 + i as f64 }),
            new_balance_orig: Some(0.0),
            name_dest: Some(format!("M{}", 2000 + i)),
            old_balance_dest: Some(0.0),
            new_balance_dest: Some(0.0),
            is_fraud: Some(fraud as i64),
            is_flagged_fraud: Some(0),
        }
    }

    fn create_test_frame(n_fraud: usize, n_legit: usize) -> Frame {
        let rows: Vec<Transaction> = (0..n_fraud + n_legit)
            .map(|i| transaction(i, i < n_fraud))
            .collect();
        transactions_to_frame(&rows).unwrap()
    }

    fn matrix_from_rows(n_cols: usize, rows: &[Vec<f64>]) -> FeatureMatrix {
        let names = (0..n_cols).map(|c| format!("f{}", c)).collect();
        let mut matrix = FeatureMatrix::new(names);
        for row in rows {
            matrix.push_row(row.iter().copied().enumerate());
        }
        matrix
    }

    fn population_variance(values: &[f64]) -> f64 {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
    }

    #[test]
    fn test_read_transactions_respects_row_cap() {
        let file = write_csv(&[
            "1,PAYMENT,9839.64,C1231006815,170136.0,160296.36,M1979787155,0.0,0.0,0,0",
            "1,PAYMENT,1864.28,C1666544295,21249.0,19384.72,M2044282225,0.0,0.0,0,0",
            "1,TRANSFER,181.0,C1305486145,181.0,0.0,C553264065,0.0,0.0,1,0",
            "1,CASH_OUT,181.0,C840083671,181.0,0.0,C38997010,21182.0,0.0,1,0",
        ]);
        let transactions = read_transactions(file.path(), 3).unwrap();
        assert_eq!(transactions.len(), 3, "Only the first 3 rows should be read");
        assert_eq!(transactions[2].kind.as_deref(), Some("TRANSFER"));
        assert_eq!(transactions[2].is_fraud, Some(1));
    }

    #[test]
    fn test_empty_cells_load_as_missing() {
        let file = write_csv(&[
            "1,,9839.64,C1231006815,,160296.36,M1979787155,0.0,0.0,,0",
            "2,PAYMENT,NaN,C1666544295,21249.0,19384.72,M2044282225,0.0,0.0,0,0",
        ]);
        let frame = load_frame(file.path(), 10).unwrap();
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.n_cols(), 11, "All header columns should be present");
        assert_eq!(frame.categorical("type").unwrap()[0], None);
        assert_eq!(frame.numeric("oldbalanceOrg").unwrap()[0], None);
        assert_eq!(frame.numeric("isFraud").unwrap()[0], None);
        assert_eq!(frame.numeric("amount").unwrap()[1], None, "NaN should count as missing");
        assert_eq!(frame.numeric("step").unwrap()[1], Some(2.0));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_transactions(std::path::Path::new("/nonexistent/transactions.csv"), 10);
        assert!(matches!(result, Err(PipelineError::Io { .. })), "Missing file should be an I/O error");
    }

    #[test]
    fn test_malformed_row_is_parse_error() {
        let file = write_csv(&[
            "1,PAYMENT,9839.64,C1231006815,170136.0,160296.36,M1979787155,0.0,0.0,0,0",
            "1,PAYMENT,not-a-number,C1666544295,21249.0,19384.72,M2044282225,0.0,0.0,0,0",
        ]);
        match read_transactions(file.path(), 10) {
            Err(PipelineError::Parse { line, .. }) => assert!(line.is_some(), "Parse errors carry a line"),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_header_without_label_columns_is_key_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest").unwrap();
        writeln!(file, "1,PAYMENT,9839.64,C1231006815,170136.0,160296.36,M1979787155,0.0,0.0").unwrap();
        file.flush().unwrap();

        match load_frame(file.path(), 10) {
            Err(PipelineError::MissingColumn { column }) => {
                assert_eq!(column, "isFraud", "First absent header is reported");
            }
            other => panic!("expected a missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_header_may_carry_extra_columns_in_any_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "isFlaggedFraud,isFraud,note,step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest").unwrap();
        writeln!(file, "0,1,x,3,TRANSFER,181.0,C1305486145,181.0,0.0,C553264065,0.0,0.0").unwrap();
        file.flush().unwrap();

        let frame = load_frame(file.path(), 10).unwrap();
        assert_eq!(frame.n_cols(), 11);
        assert_eq!(frame.numeric("isFraud").unwrap(), &[Some(1.0)]);
        assert_eq!(frame.numeric("step").unwrap(), &[Some(3.0)]);
    }

    #[test]
    fn test_frame_rejects_ragged_and_unknown_columns() {
        let frame = Frame::new()
            .with_column("a", Column::Numeric(vec![Some(1.0), None]))
            .unwrap();
        let ragged = frame.clone().with_column("b", Column::Numeric(vec![Some(1.0)]));
        assert!(matches!(ragged, Err(PipelineError::LengthMismatch { .. })));
        assert!(matches!(frame.select(&["a", "zzz"]), Err(PipelineError::MissingColumn { .. })));
        assert!(matches!(frame.categorical("a"), Err(PipelineError::ColumnType { .. })));
    }

    #[test]
    fn test_imputation_leaves_no_missing_values() {
        let mut frame = create_test_frame(3, 7);
        frame
            .replace("amount", Column::Numeric(vec![None, Some(10.0), None, Some(20.0), Some(30.0), None, Some(1.0), Some(2.0), Some(3.0), None]))
            .unwrap();
        frame
            .replace("type", Column::Categorical(vec![None, Some("A".into()), Some("B".into()), None, Some("B".into()), Some("A".into()), Some("B".into()), None, None, Some("A".into())]))
            .unwrap();

        let config = PipelineConfig::default();
        let stats = ImputerStats::fit(&frame, &config.numeric(), &config.categorical()).unwrap();
        let imputed = stats.transform(&frame).unwrap();

        for name in config.numeric().into_iter().chain(config.categorical()) {
            assert_eq!(imputed.column(name).unwrap().missing_count(), 0, "Column {} still has gaps", name);
        }
    }

    #[test]
    fn test_imputed_value_equals_observed_mean() {
        let observed = vec![Some(2.0), None, Some(4.0), Some(9.0), None];
        let frame = Frame::new()
            .with_column("amount", Column::Numeric(observed.clone()))
            .unwrap();
        let stats = ImputerStats::fit(&frame, &["amount"], &[]).unwrap();
        let imputed = stats.transform(&frame).unwrap();

        let mean = column_mean(&observed).unwrap();
        assert!((mean - 5.0).abs() < 1e-12);
        let values = imputed.numeric("amount").unwrap();
        assert!((values[1].unwrap() - mean).abs() < 1e-12, "Gap should be filled with the mean");
        assert!((values[4].unwrap() - mean).abs() < 1e-12, "Gap should be filled with the mean");
        assert_eq!(values[0], Some(2.0), "Observed values must not change");
    }

    #[test]
    fn test_mode_ties_go_to_first_seen_value() {
        let values: Vec<Option<String>> = ["B", "A", "A", "B", "C"]
            .iter()
            .map(|s| Some(s.to_string()))
            .chain(std::iter::once(None))
            .collect();
        assert_eq!(column_mode(&values).as_deref(), Some("B"));
        assert_eq!(column_mode(&[None, None]), None);
    }

    #[test]
    fn test_imputing_all_missing_column_fails() {
        let frame = Frame::new()
            .with_column("amount", Column::Numeric(vec![None, None]))
            .unwrap();
        let result = ImputerStats::fit(&frame, &["amount"], &[]);
        assert!(matches!(result, Err(PipelineError::EmptyColumn { .. })));
    }

    #[test]
    fn test_one_hot_columns_match_distinct_values() {
        let frame = create_test_frame(2, 4)
            .select(&["amount", "type", "nameOrig"])
            .unwrap();
        let vocabulary = OneHotVocabulary::fit(&frame, &["type", "nameOrig"]).unwrap();
        let encoded = vocabulary.transform(&frame).unwrap();

        let count = |prefix: &str| encoded.names().iter().filter(|n| n.starts_with(prefix)).count();
        assert_eq!(count("type_"), 2, "TRANSFER and PAYMENT");
        assert_eq!(count("nameOrig_"), 6, "One column per distinct account");

        let group: Vec<usize> = (0..encoded.n_cols())
            .filter(|&c| encoded.names()[c].starts_with("type_"))
            .collect();
        for row in 0..encoded.n_rows() {
            let ones: f64 = group.iter().map(|&c| encoded.get(row, c)).sum();
            assert_eq!(ones, 1.0, "Row {} should have exactly one type indicator", row);
        }
    }

    #[test]
    fn test_encoded_columns_follow_passthrough_then_groups() {
        let frame = create_test_frame(1, 1);
        let vocabulary = OneHotVocabulary::fit(&frame, &["type", "nameOrig", "nameDest"]).unwrap();
        let names = vocabulary.feature_names();
        assert_eq!(
            &names[..8],
            &["step", "amount", "oldbalanceOrg", "newbalanceOrig", "oldbalanceDest", "newbalanceDest", "isFraud", "isFlaggedFraud"]
        );
        assert_eq!(&names[8..10], &["type_PAYMENT", "type_TRANSFER"]);
        assert_eq!(names.len(), 8 + 2 + 2 + 2);
    }

    #[test]
    fn test_unlisted_categorical_column_is_rejected() {
        let frame = create_test_frame(1, 1);
        let result = OneHotVocabulary::fit(&frame, &["type"]);
        assert!(matches!(result, Err(PipelineError::ColumnType { .. })));
    }

    #[test]
    fn test_split_extracts_clean_labels() {
        let mut frame = create_test_frame(2, 3);
        frame
            .replace("isFraud", Column::Numeric(vec![Some(1.0), Some(1.0), None, Some(0.0), None]))
            .unwrap();
        let vocabulary = OneHotVocabulary::fit(&frame, &["type", "nameOrig", "nameDest"]).unwrap();
        let encoded = vocabulary.transform(&frame).unwrap();

        let set = split_features_target(&encoded, "isFraud", &["isFlaggedFraud"]).unwrap();
        assert_eq!(set.labels, vec![1, 1, 0, 0, 0], "Missing labels become 0");
        assert_eq!(set.features.n_cols(), encoded.n_cols() - 2);
        assert!(set.features.column_index("isFraud").is_err());
        assert!(set.features.column_index("isFlaggedFraud").is_err());
    }

    #[test]
    fn test_split_missing_label_column_is_key_error() {
        let matrix = matrix_from_rows(2, &[vec![1.0, 0.0]]);
        let result = split_features_target(&matrix, "isFraud", &[]);
        assert!(matches!(result, Err(PipelineError::MissingColumn { .. })));
    }

    #[test]
    fn test_split_rejects_non_binary_label() {
        let mut matrix = FeatureMatrix::new(vec!["amount".into(), "isFraud".into()]);
        matrix.push_row(vec![(0, 1.0), (1, 2.0)]);
        let result = split_features_target(&matrix, "isFraud", &[]);
        assert!(matches!(result, Err(PipelineError::InvalidLabel { row: 0, .. })));
    }

    #[test]
    fn test_undersample_ten_row_scenario() {
        let labels = vec![0, 1, 0, 0, 0, 0, 1, 0, 0, 0];
        let subset = undersample(&labels, 42).unwrap();

        assert_eq!(subset.len(), 4, "2 fraud + 2 non-fraud rows");
        assert!(subset.contains(&1) && subset.contains(&6), "Every fraud row is kept");
        assert!(subset.windows(2).all(|w| w[0] < w[1]), "Subset is sorted without duplicates");
        let fraud = subset.iter().filter(|&&r| labels[r] == 1).count();
        assert_eq!(fraud, 2);
        assert_eq!(subset.len() - fraud, 2);
        assert_eq!(undersample(&labels, 42).unwrap(), subset, "Same seed, same subset");

        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let set = LabeledSet {
            features: matrix_from_rows(2, &rows),
            labels: labels.clone(),
        };
        let reduced = set.select_rows(&subset);
        let balanced = Smote::new(5, 42).resample(&reduced).unwrap();
        let counts = balanced.class_counts();
        assert_eq!(counts[0], counts[1]);
        assert!(counts[1] >= 2);
        assert!(balanced.len() >= reduced.len());
    }

    #[test]
    fn test_undersample_without_fraud_fails() {
        let result = undersample(&[0, 0, 0], 42);
        assert!(matches!(result, Err(PipelineError::InsufficientSamples { class: 1, .. })));
        let result = undersample(&[1, 1, 0], 42);
        assert!(matches!(result, Err(PipelineError::InsufficientSamples { class: 0, .. })));
    }

    #[test]
    fn test_smote_reaches_parity_with_interpolated_rows() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            rows.push(vec![i as f64, 0.0]);
            labels.push(0);
        }
        for i in 0..6 {
            rows.push(vec![100.0 + i as f64, 10.0 + (i % 2) as f64]);
            labels.push(1);
        }
        let set = LabeledSet {
            features: matrix_from_rows(2, &rows),
            labels,
        };

        let balanced = Smote::new(5, 42).resample(&set).unwrap();
        assert_eq!(balanced.class_counts(), [10, 10]);
        assert_eq!(balanced.len(), 20, "4 synthetic rows appended");
        assert_eq!(balanced.select_rows(&(0..16).collect::<Vec<_>>()), set, "Originals are kept in place");

        for row in 16..20 {
            let x = balanced.features.get(row, 0);
            let y = balanced.features.get(row, 1);
            assert!((100.0..=105.0).contains(&x), "Synthetic x {} outside minority range", x);
            assert!((10.0..=11.0).contains(&y), "Synthetic y {} outside minority range", y);
        }
    }

    #[test]
    fn test_smote_needs_enough_minority_neighbours() {
        let rows: Vec<Vec<f64>> = (0..13).map(|i| vec![i as f64]).collect();
        let mut labels = vec![0; 10];
        labels.extend([1, 1, 1]);
        let set = LabeledSet {
            features: matrix_from_rows(1, &rows),
            labels,
        };
        match Smote::new(5, 42).resample(&set) {
            Err(PipelineError::InsufficientSamples { class, count, required }) => {
                assert_eq!((class, count, required), (1, 3, 6));
            }
            other => panic!("expected insufficient samples, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_scaler_gives_unit_variance_and_keeps_zero_columns() {
        let rows = vec![
            vec![1.0, 0.0, 5.0],
            vec![2.0, 0.0, 5.0],
            vec![3.0, 0.0, 5.0],
            vec![4.0, 0.0, 5.0],
        ];
        let matrix = matrix_from_rows(3, &rows);
        let stats = ScalerStats::fit(&matrix).unwrap();
        let scaled = stats.transform(&matrix).unwrap();

        assert_eq!((scaled.n_rows(), scaled.n_cols()), (4, 3), "Shape is preserved");
        assert!((population_variance(&scaled.column(0)) - 1.0).abs() < 1e-9);
        assert!(scaled.column(1).iter().all(|&v| v == 0.0), "Zero column stays exactly zero");
        assert!(scaled.column(2).iter().all(|&v| v == 5.0), "Constant column is left unchanged");

        let wrong = matrix_from_rows(2, &[vec![1.0, 2.0]]);
        assert!(matches!(stats.transform(&wrong), Err(PipelineError::ShapeMismatch(_))));
    }

    #[test]
    fn test_scaler_does_not_center() {
        let matrix = matrix_from_rows(1, &[vec![0.0], vec![0.0], vec![2.0], vec![2.0]]);
        let scaled = ScalerStats::fit(&matrix).unwrap().transform(&matrix).unwrap();
        assert_eq!(scaled.column(0), vec![0.0, 0.0, 2.0, 2.0], "std is 1, values unchanged");
        assert_eq!(scaled.nnz(), 2, "Zeros stay implicit");
    }

    #[test]
    fn test_perfect_and_inverted_predictions() {
        let truth = vec![0, 1, 1, 0, 1, 0];
        let scores: Vec<f64> = truth.iter().map(|&t| t as f64).collect();
        assert_eq!(accuracy(&truth, &truth).unwrap(), 1.0);
        assert_eq!(roc_auc(&truth, &scores).unwrap(), 1.0);

        let inverted: Vec<usize> = truth.iter().map(|&t| 1 - t).collect();
        let inverted_scores: Vec<f64> = inverted.iter().map(|&t| t as f64).collect();
        assert_eq!(accuracy(&truth, &inverted).unwrap(), 0.0);
        assert_eq!(roc_auc(&truth, &inverted_scores).unwrap(), 0.0);
    }

    #[test]
    fn test_auc_counts_ties_as_half() {
        assert_eq!(roc_auc(&[0, 1], &[0.5, 0.5]).unwrap(), 0.5);
        assert_eq!(roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap(), 0.75);
        assert!(matches!(roc_auc(&[1, 1], &[0.2, 0.9]), Err(PipelineError::UndefinedMetric { .. })));
    }

    #[test]
    fn test_classification_report_values() {
        let report = classification_report(&[1, 1, 0, 0], &[1, 0, 0, 0]).unwrap();
        let fraud = report.classes[&1];
        assert_eq!(fraud.precision, 1.0);
        assert_eq!(fraud.recall, 0.5);
        assert!((fraud.f1 - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(fraud.support, 2);

        let legit = report.classes[&0];
        assert!((legit.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(legit.recall, 1.0);
        assert_eq!(report.accuracy, 0.75);
        assert!((report.macro_avg.recall - 0.75).abs() < 1e-12);
        assert_eq!(report.weighted_avg.support, 4);

        let rendered = report.to_string();
        assert!(rendered.contains("macro avg") && rendered.contains("weighted avg"));
    }

    #[test]
    fn test_train_test_split_sizes() {
        let (train, test) = train_test_split(10, 0.3, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 7);
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>(), "Split is a partition");
        assert_eq!(train_test_split(10, 0.3, 42).unwrap(), (train, test));
    }

    #[test]
    fn test_too_few_rows_for_folds_is_fit_error() {
        assert!(matches!(stratified_folds(&[0, 1, 0], 5), Err(PipelineError::Fit(_))));
        // Five rows, but the per-class chunks only reach three folds.
        assert!(matches!(stratified_folds(&[0, 0, 1, 1, 1], 5), Err(PipelineError::Fit(_))));
    }

    #[test]
    fn test_stratified_folds_partition_rows() {
        let labels: Vec<usize> = (0..20).map(|i| usize::from(i % 4 == 0)).collect();
        let folds = stratified_folds(&labels, 5).unwrap();
        assert_eq!(folds.len(), 5);
        for fold in &folds {
            assert_eq!(fold.len(), 4);
            assert_eq!(fold.iter().filter(|&&r| labels[r] == 1).count(), 1, "Each fold has one fraud row");
        }
        let mut all: Vec<usize> = folds.concat();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    fn separable_data(n: usize) -> (Array2<f64>, Array1<usize>) {
        let mut values = Vec::with_capacity(n * 2);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let class = i % 2;
            values.push(class as f64 * 10.0);
            values.push((i % 3) as f64);
            labels.push(class);
        }
        (Array2::from_shape_vec((n, 2), values).unwrap(), Array1::from(labels))
    }

    #[test]
    fn test_grid_search_runs_every_configuration() {
        let (x, y) = separable_data(40);
        let search = GridSearch {
            grid: ParamGrid::default(),
            n_folds: 5,
            feature_subsample: 1.0,
            seed: 42,
        };
        let result = search.fit(&x, &y).unwrap();

        assert_eq!(result.n_fits, 45, "9 configurations x 5 folds");
        assert_eq!(result.candidates.len(), 9);
        assert!(result.candidates.iter().all(|c| c.fold_scores.len() == 5));
        assert!(ParamGrid::default().candidates().contains(&result.best_params));
        assert!(result.best_score > 0.9, "Separable data should score well, got {}", result.best_score);
        assert_eq!(
            result.best_params,
            ForestParams { n_estimators: 100, max_depth: 10 },
            "Equal scores resolve to the first candidate"
        );
    }

    #[test]
    fn test_forest_rejects_single_class_training_set() {
        let x = Array2::from_shape_vec((3, 1), vec![1.0, 2.0, 3.0]).unwrap();
        let y = Array1::from(vec![0, 0, 0]);
        let params = ForestParams { n_estimators: 3, max_depth: 2 };
        let result = RandomForest::fit(&x, &y, params, 1.0, 42);
        assert!(matches!(result, Err(PipelineError::Fit(_))));
    }

    #[test]
    fn test_forest_votes_are_probabilities() {
        let (x, y) = separable_data(30);
        let params = ForestParams { n_estimators: 15, max_depth: 4 };
        let forest = RandomForest::fit(&x, &y, params, 1.0, 7).unwrap();
        let proba = forest.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        let predicted = forest.predict(&x).unwrap();
        assert!(accuracy(y.as_slice().unwrap(), predicted.as_slice().unwrap()).unwrap() > 0.9);
    }

    #[test]
    fn test_end_to_end_pipeline() {
        let frame = create_test_frame(12, 60);
        let config = PipelineConfig {
            grid: ParamGrid {
                n_estimators: vec![5, 10],
                max_depth: vec![3],
            },
            ..PipelineConfig::default()
        };
        let outcome = run_on_frame(&frame, &config).unwrap();

        assert_eq!(outcome.search.n_fits, 10);
        assert!(config.grid.candidates().contains(&outcome.report.best_params));
        let report = &outcome.report.classification_report;
        assert_eq!(report.macro_avg.support, 8, "30% of the 24 balanced rows");
        assert!(report.accuracy >= 0.8, "Separable data, got {}", report.accuracy);
        assert!((0.0..=1.0).contains(&outcome.report.auc_roc));

        let json = serde_json::to_value(&outcome.report).unwrap();
        assert!(json["best_params"]["n_estimators"].is_u64());
        assert!(json["classification_report"]["1"]["recall"].is_f64());
        assert!(json["auc_roc"].is_f64());

        let predicted = outcome.model.predict(&frame).unwrap();
        assert_eq!(predicted.len(), frame.n_rows());
    }

    #[test]
    fn test_fitted_model_reuses_training_artifacts() {
        let frame = create_test_frame(12, 60);
        let config = PipelineConfig {
            grid: ParamGrid {
                n_estimators: vec![5],
                max_depth: vec![3],
            },
            ..PipelineConfig::default()
        };
        let model = run_on_frame(&frame, &config).unwrap().model;

        // Same stages by hand, with the artifacts fitted during the run
        let imputed = model.imputer.transform(&frame).unwrap();
        let encoded = model.vocabulary.transform(&imputed).unwrap();
        let features = drop_named_columns(&encoded, &["isFraud", "isFlaggedFraud"]).unwrap();
        let scaled = model.scaler.transform(&features).unwrap();
        let expected = model
            .forest
            .predict(&scaled.to_dense(&model.active_columns).unwrap())
            .unwrap();

        let predicted = model.predict(&frame).unwrap();
        assert_eq!(predicted, expected, "Scoring replays the fitted stages");
        assert_eq!(model.predict(&frame).unwrap(), predicted, "Scoring is repeatable");

        let names: Vec<&str> = frame.iter().map(|(name, _)| name).rev().collect();
        let reordered = frame.select(&names).unwrap();
        assert_eq!(model.predict(&reordered).unwrap(), predicted, "Column order does not matter");
    }

    #[test]
    fn test_pipeline_reports_failing_stage() {
        let frame = create_test_frame(0, 10);
        let err = match run_on_frame(&frame, &PipelineConfig::default()) {
            Err(err) => err,
            Ok(_) => panic!("a table without fraud cannot be balanced"),
        };
        assert_eq!(err.to_string(), "undersampling");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InsufficientSamples { class: 1, .. })
        ));
    }
}
