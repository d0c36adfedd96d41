use std::collections::HashMap;
use std::time::Instant;

use ndarray::Array2;

use crate::geometry::coords::{CropSpace, FrameSpace, ImageSpace, LandmarkSet};
use crate::geometry::crop::{inverse_landmarks, project_landmarks, CropSpec};
use crate::identity::domain::identity_grouper::IdentityGrouper;
use crate::identity::infrastructure::cosine_identity_grouper::CosineIdentityGrouper;
use crate::loading::domain::frame_loader::{check_uniform_size, FrameLoader, LoadedFrame};
use crate::pipeline::config::AnalyzerConfig;
use crate::pipeline::frame_faces::{BatchFaces, FaceCrops};
use crate::pipeline::letterbox_corrector::correct_letterbox;
use crate::pipeline::pipeline_logger::{PipelineLogger, Stage};
use crate::pipeline::result_table::{ResultRow, ResultTable};
use crate::prediction::domain::capability::Capability;
use crate::prediction::domain::detection::select_detections;
use crate::prediction::domain::predictors::{FaceBatch, ModelInfo, PredictorSet};
use crate::shared::constants::DEFAULT_FACE_SIZE;
use crate::shared::error::{AnalyzeError, ConfigError};

/// Detect → extract → predict → reproject over every batch of a loader,
/// assembled into one table in original-image coordinates.
pub struct AnalyzeFacesUseCase {
    config: AnalyzerConfig,
    predictors: PredictorSet,
    logger: Box<dyn PipelineLogger>,
    identity_grouper: Option<Box<dyn IdentityGrouper>>,
}

impl AnalyzeFacesUseCase {
    /// Validates the configuration and the predictor set up front, so
    /// configuration problems surface before any frame is read.
    pub fn new(
        config: AnalyzerConfig,
        predictors: PredictorSet,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        predictors.validate()?;
        let identity_grouper = predictors.identity.is_some().then(|| {
            Box::new(CosineIdentityGrouper::new(config.identity_threshold))
                as Box<dyn IdentityGrouper>
        });
        Ok(Self {
            config,
            predictors,
            logger,
            identity_grouper,
        })
    }

    /// Crop used by the landmark model, and by every classifier that does
    /// not ask for its own.
    pub fn generic_crop_spec(&self) -> CropSpec {
        self.predictors
            .landmarks
            .as_ref()
            .map(|l| l.crop_spec())
            .unwrap_or(CropSpec::new(DEFAULT_FACE_SIZE, 1.0))
    }

    fn crop_specs(&self) -> Vec<CropSpec> {
        let generic = self.generic_crop_spec();
        let mut specs = vec![generic];
        let own = [
            &self.predictors.action_units,
            &self.predictors.emotion,
            &self.predictors.identity,
        ];
        for spec in own.into_iter().flatten().filter_map(|c| c.crop_spec()) {
            if !specs.contains(&spec) {
                specs.push(spec);
            }
        }
        specs
    }

    /// Runs the face / pose detector on every frame of the batch and crops
    /// the surviving faces at every crop spec the predictor set needs.
    pub fn detect_faces(&mut self, batch: &[LoadedFrame]) -> Result<BatchFaces, AnalyzeError> {
        let started = Instant::now();
        let threshold = self.config.face_detection_threshold;
        let mut per_frame = Vec::with_capacity(batch.len());
        for item in batch {
            let candidates = self
                .predictors
                .face
                .detect(&item.frame)
                .map_err(|e| AnalyzeError::predict(Capability::FaceDetection, e))?;
            let detections = select_detections(candidates, threshold);
            if detections.first().is_some_and(|d| d.is_sentinel()) {
                log::warn!(
                    "No face scoring >= {threshold} in {} (frame {})",
                    item.source,
                    item.frame.index()
                );
            }
            per_frame.push(detections);
        }
        let mut faces = BatchFaces::new(per_frame);
        self.logger.timing(Stage::Detect, elapsed_ms(started));

        let started = Instant::now();
        for spec in self.crop_specs() {
            faces.extract(batch, spec);
        }
        self.logger.timing(Stage::Extract, elapsed_ms(started));
        Ok(faces)
    }

    /// Runs the configured predictors over the batch's crops and assembles
    /// one row per detection in frame coordinates.
    ///
    /// Disabled capabilities and sentinel rows come out as NaN.
    pub fn forward(
        &mut self,
        batch: &[LoadedFrame],
        faces: &BatchFaces,
    ) -> Result<ResultTable<FrameSpace>, AnalyzeError> {
        let started = Instant::now();
        let n = faces.len();
        let generic_spec = self.generic_crop_spec();
        let generic = crops_for(faces, generic_spec)?;
        let sentinels: Vec<usize> = faces.sentinel_rows().collect();

        let crop_landmarks = match self.predictors.landmarks.as_mut() {
            Some(predictor) => {
                let mut landmarks = predictor
                    .predict(generic.tensor.view())
                    .map_err(|e| AnalyzeError::predict(Capability::Landmarks, e))?;
                if landmarks.len() != n {
                    return Err(AnalyzeError::predict(
                        Capability::Landmarks,
                        format!("returned {} landmark sets for {n} faces", landmarks.len()),
                    ));
                }
                for &i in &sentinels {
                    landmarks[i] = LandmarkSet::nan();
                }
                Some(landmarks)
            }
            None => None,
        };
        let frame_landmarks: Vec<LandmarkSet<FrameSpace>> = match &crop_landmarks {
            Some(landmarks) => landmarks
                .iter()
                .zip(&generic.windows)
                .map(|(lm, window)| inverse_landmarks(lm, window))
                .collect(),
            None => vec![LandmarkSet::nan(); n],
        };

        let mut outputs: HashMap<Capability, Array2<f32>> = HashMap::new();
        for (capability, slot) in self.predictors.classifiers_mut() {
            let Some(classifier) = slot.as_mut() else {
                continue;
            };
            let spec = classifier.crop_spec().unwrap_or(generic_spec);
            let crops = crops_for(faces, spec)?;
            let projected: Option<Vec<LandmarkSet<CropSpace>>> = match &crop_landmarks {
                Some(landmarks) if spec == generic_spec => Some(landmarks.clone()),
                Some(_) => Some(
                    frame_landmarks
                        .iter()
                        .zip(&crops.windows)
                        .map(|(lm, window)| project_landmarks(lm, window))
                        .collect(),
                ),
                None => None,
            };
            let face_batch = FaceBatch {
                crops: crops.tensor.view(),
                landmarks: projected.as_deref(),
            };
            let mut output = classifier
                .predict(&face_batch)
                .map_err(|e| AnalyzeError::predict(capability, e))?;
            let expected = (n, capability.output_width());
            if output.dim() != expected {
                return Err(AnalyzeError::predict(
                    capability,
                    format!("output shape {:?}, expected {expected:?}", output.shape()),
                ));
            }
            for &i in &sentinels {
                output.row_mut(i).fill(f32::NAN);
            }
            outputs.insert(capability, output);
        }
        let mut take = |capability: Capability| {
            outputs
                .remove(&capability)
                .unwrap_or_else(|| Array2::from_elem((n, capability.output_width()), f32::NAN))
        };
        let action_units = take(Capability::ActionUnits);
        let emotions = take(Capability::Emotion);
        let identities = take(Capability::Identity);

        let mut table = ResultTable::new(self.predictors.model_info());
        for (i, (detection, &slot)) in faces.detections().iter().zip(faces.slots()).enumerate() {
            let item = &batch[slot];
            table.push(ResultRow {
                face_box: generic.windows[i].bbox,
                face_score: detection.score,
                landmarks: frame_landmarks[i].clone(),
                pose: detection.pose,
                action_units: std::array::from_fn(|j| action_units[[i, j]]),
                emotions: std::array::from_fn(|j| emotions[[i, j]]),
                identity_embedding: identities.row(i).to_vec(),
                input: item.source.clone(),
                frame: item.frame.index(),
                frame_height: item.letterbox.original_height,
                frame_width: item.letterbox.original_width,
                approx_time: None,
                identity: None,
            });
        }
        self.logger.timing(Stage::Predict, elapsed_ms(started));
        Ok(table)
    }

    /// Analyzes every batch the loader yields.
    ///
    /// A batch whose frames differ in size fails the whole call before any
    /// model sees it.
    pub fn detect(
        &mut self,
        loader: &mut dyn FrameLoader,
    ) -> Result<ResultTable<ImageSpace>, AnalyzeError> {
        let total = loader.frame_count();
        let model_info = self.predictors.model_info();
        self.logger.info(&format!("Analyzing with {}", describe_models(&model_info)));
        let mut tables = vec![ResultTable::new(model_info)];
        let mut frames_done = 0;

        while let Some(batch) = loader.next_batch() {
            let batch = batch.map_err(AnalyzeError::Load)?;
            if batch.is_empty() {
                continue;
            }
            check_uniform_size(&batch)?;

            let faces = self.detect_faces(&batch)?;
            let table = self.forward(&batch, &faces)?;

            let started = Instant::now();
            let letterboxes = batch
                .iter()
                .map(|item| (item.frame.index(), item.letterbox))
                .collect();
            tables.push(correct_letterbox(table, &letterboxes));
            self.logger.timing(Stage::Reproject, elapsed_ms(started));

            frames_done += batch.len();
            self.logger.metric("faces per batch", faces.face_count() as f64);
            self.logger.progress(frames_done, total);
            log::debug!(
                "Batch of {} frames: {} faces, {} empty frames",
                batch.len(),
                faces.face_count(),
                faces.sentinel_rows().count()
            );
        }

        let mut table = ResultTable::concat(tables);
        if let Some(metadata) = loader.video_metadata() {
            table.set_approx_times(&metadata);
        }
        if let Some(grouper) = &self.identity_grouper {
            table.assign_identities(grouper.as_ref());
        }
        self.logger.summary();
        log::info!("Analyzed {frames_done} frames, {} rows", table.len());
        Ok(table)
    }
}

fn crops_for(faces: &BatchFaces, spec: CropSpec) -> Result<&FaceCrops, AnalyzeError> {
    faces.crops(spec).ok_or_else(|| {
        ConfigError::InvalidValue {
            option: "crop spec",
            reason: format!(
                "no {}px / {} crops were extracted for this batch",
                spec.size, spec.expand
            ),
        }
        .into()
    })
}

fn describe_models(info: &ModelInfo) -> String {
    let name = |model: &Option<String>| model.clone().unwrap_or_else(|| "off".to_string());
    format!(
        "face={} landmarks={} au={} emotion={} identity={}",
        info.face_model,
        name(&info.landmark_model),
        name(&info.au_model),
        name(&info.emotion_model),
        name(&info.identity_model)
    )
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
