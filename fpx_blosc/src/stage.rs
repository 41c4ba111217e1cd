use std::sync::Arc;

use fpx_codecs::BloscCodec;
use fpx_core::{scratch_buffer, CodecStatus, DataBlockPool, DataType, Frame, FrameCodec};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::StageConfig;
use crate::error::StageError;
use crate::settings::{apply_update, CompressionSettings, ConfigReply};
use crate::sink::FrameSink;
use crate::stats::{StageStats, StatsSnapshot};
use crate::{CONFIG_COMPRESSOR, CONFIG_LEVEL, CONFIG_SHUFFLE, CONFIG_THREADS, DEFAULT_TYPE_SIZE};

/// Everything guarded by the stage lock. The codec lives here so its
/// compressor and thread selection can only change between frames.
struct StageState {
    commanded: CompressionSettings,
    active: CompressionSettings,
    /// `None` until the first frame has been bound.
    current_acquisition: Option<String>,
    codec: Box<dyn FrameCodec>,
}

/// Compresses each incoming frame into a new frame and forwards it.
///
/// Settings requested through [`configure`](Self::configure) are held as
/// *commanded* and copied to *active* when a frame with a new acquisition id
/// arrives, so every frame of one acquisition is compressed the same way.
pub struct BloscStage {
    name: String,
    default_type_size: usize,
    state: Mutex<StageState>,
    pool: Arc<DataBlockPool>,
    sink: Box<dyn FrameSink>,
    stats: StageStats,
}

impl BloscStage {
    /// Build a stage with default settings. The default compressor and
    /// thread count are applied to `codec` immediately.
    pub fn new(
        name: impl Into<String>,
        mut codec: Box<dyn FrameCodec>,
        pool: Arc<DataBlockPool>,
        sink: impl FrameSink + 'static,
    ) -> Result<Self, StageError> {
        let name = name.into();
        let settings = CompressionSettings::default();
        apply_to_codec(codec.as_mut(), &settings)?;

        info!(
            stage = %name,
            version = crate::version_long(),
            codec = codec.name(),
            %settings,
            "blosc stage created"
        );

        Ok(Self {
            name,
            default_type_size: DEFAULT_TYPE_SIZE,
            state: Mutex::new(StageState {
                commanded: settings,
                active: settings,
                current_acquisition: None,
                codec,
            }),
            pool,
            sink: Box::new(sink),
            stats: StageStats::default(),
        })
    }

    /// Build a stage from a config file. The `[compression]` table becomes
    /// the initial commanded settings, clamped like any runtime update.
    pub fn from_config(
        config: &StageConfig,
        codec: Box<dyn FrameCodec>,
        pool: Arc<DataBlockPool>,
        sink: impl FrameSink + 'static,
    ) -> Result<Self, StageError> {
        let mut stage = Self::new(config.name.clone(), codec, pool, sink)?;
        stage.default_type_size = config.default_type_size.max(1);

        let update = config.initial_update();
        if !update.is_empty() {
            let reply = stage.apply(&update);
            for (key, value) in reply.iter() {
                warn!(stage = %stage.name, %key, %value, "initial setting adjusted");
            }
        }
        Ok(stage)
    }

    /// [`from_config`](Self::from_config) with the bundled blosc codec.
    pub fn with_bundled_codec(
        config: &StageConfig,
        pool: Arc<DataBlockPool>,
        sink: impl FrameSink + 'static,
    ) -> Result<Self, StageError> {
        Self::from_config(config, Box::new(BloscCodec::new()), pool, sink)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &Arc<DataBlockPool> {
        &self.pool
    }

    /// Compress `frame` and push the result downstream.
    ///
    /// On any error nothing is forwarded and the stage stays usable.
    pub fn process(&self, frame: &Frame) -> Result<(), StageError> {
        let mut state = self.state.lock();
        let compressed = self.compress_locked(&mut state, frame)?;
        let (frame_number, cbytes) = (compressed.frame_number(), compressed.data_size());
        self.sink
            .push(compressed)
            .map_err(|source| StageError::Downstream { frame_number, source })?;
        self.stats.record_frame(frame.data_size(), cbytes);
        Ok(())
    }

    /// Compress `frame` without forwarding it.
    pub fn compress_frame(&self, frame: &Frame) -> Result<Frame, StageError> {
        let mut state = self.state.lock();
        let out = self.compress_locked(&mut state, frame)?;
        self.stats.record_frame(frame.data_size(), out.data_size());
        Ok(out)
    }

    fn compress_locked(&self, state: &mut StageState, frame: &Frame) -> Result<Frame, StageError> {
        self.commit(state, frame.acquisition_id())?;

        let mut settings = state.active;
        settings.type_size = match frame.data_type() {
            Some(data_type) => data_type.size(),
            None => {
                self.stats.record_type_size_fallback();
                warn!(
                    stage = %self.name,
                    frame = frame.frame_number(),
                    type_size = self.default_type_size,
                    "frame has no data type, using default element size"
                );
                self.default_type_size
            }
        };
        settings.uncompressed_size = frame.data_size();

        let mut scratch = scratch_buffer(settings.uncompressed_size + state.codec.max_overhead())?;
        debug!(
            stage = %self.name,
            frame = frame.frame_number(),
            data_type = frame.data_type().map(DataType::name).unwrap_or("unset"),
            %settings,
            "compressing frame"
        );

        let compressed = match state.codec.compress(&settings.params(), frame.data(), &mut scratch) {
            Ok(n) => n,
            Err(status) => {
                self.stats.record_codec_failure();
                error!(
                    stage = %self.name,
                    frame = frame.frame_number(),
                    %settings,
                    %status,
                    "compression failed, frame dropped"
                );
                return Err(StageError::Codec {
                    status,
                    frame_number: frame.frame_number(),
                    settings,
                });
            }
        };

        if compressed > scratch.len() {
            self.stats.record_codec_failure();
            error!(
                stage = %self.name,
                frame = frame.frame_number(),
                cbytes = compressed,
                capacity = scratch.len(),
                "codec reported more bytes than the destination holds, frame dropped"
            );
            return Err(StageError::Codec {
                status: CodecStatus::FAILURE,
                frame_number: frame.frame_number(),
                settings,
            });
        }

        if compressed == 0 {
            warn!(
                stage = %self.name,
                frame = frame.frame_number(),
                %settings,
                "codec produced no output"
            );
        }

        let mut out = Frame::new(Arc::clone(&self.pool), frame.dataset_name())
            .with_acquisition_id(frame.acquisition_id())
            .with_frame_number(frame.frame_number())
            .with_dimensions(frame.dimensions().to_vec());
        out.set_data_type(frame.data_type());
        out.copy_data(&scratch[..compressed])?;

        debug!(
            stage = %self.name,
            frame = frame.frame_number(),
            nbytes = settings.uncompressed_size,
            cbytes = compressed,
            "frame compressed"
        );
        Ok(out)
    }

    /// Bind the stage to `acquisition_id` if it is not already bound to it.
    fn commit(&self, state: &mut StageState, acquisition_id: &str) -> Result<(), StageError> {
        if state.current_acquisition.as_deref() == Some(acquisition_id) {
            return Ok(());
        }

        // unbound until the codec has accepted the new parameters
        state.current_acquisition = None;
        let next = state.commanded;
        apply_to_codec(state.codec.as_mut(), &next)?;

        state.active = next;
        state.current_acquisition = Some(acquisition_id.to_string());
        self.stats.record_commit();
        info!(
            stage = %self.name,
            acquisition = acquisition_id,
            settings = %next,
            "new acquisition, settings committed"
        );
        Ok(())
    }

    /// Validate `update` into the commanded settings. Active settings are
    /// untouched until the next acquisition.
    pub fn configure(&self, update: &Value) -> ConfigReply {
        match update.as_object() {
            Some(map) => self.apply(map),
            None => {
                warn!(stage = %self.name, %update, "configuration is not an object, ignored");
                let mut reply = ConfigReply::new();
                reply.add_warning("configuration", "Expected an object, nothing applied");
                reply
            }
        }
    }

    fn apply(&self, update: &Map<String, Value>) -> ConfigReply {
        let mut reply = ConfigReply::new();
        let mut state = self.state.lock();
        let max_threads = state.codec.max_threads();
        state.commanded = apply_update(&state.commanded, update, max_threads, &mut reply);
        debug!(stage = %self.name, commanded = %state.commanded, warnings = reply.len(), "configured");
        reply
    }

    /// Commanded settings, keyed `<stage>/<field>`.
    pub fn request_configuration(&self) -> Map<String, Value> {
        self.report(&self.state.lock().commanded)
    }

    /// Settings in effect for the current acquisition, keyed `<stage>/<field>`.
    pub fn status(&self) -> Map<String, Value> {
        self.report(&self.state.lock().active)
    }

    fn report(&self, settings: &CompressionSettings) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(self.key(CONFIG_COMPRESSOR), settings.compressor.code().into());
        map.insert(self.key(CONFIG_THREADS), settings.threads.into());
        map.insert(self.key(CONFIG_SHUFFLE), settings.shuffle.code().into());
        map.insert(self.key(CONFIG_LEVEL), settings.level.into());
        map
    }

    fn key(&self, field: &str) -> String {
        format!("{}/{}", self.name, field)
    }

    pub fn commanded_settings(&self) -> CompressionSettings {
        self.state.lock().commanded
    }

    pub fn active_settings(&self) -> CompressionSettings {
        self.state.lock().active
    }

    pub fn current_acquisition(&self) -> Option<String> {
        self.state.lock().current_acquisition.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// Assert the compressor and thread count of `settings` into `codec`.
fn apply_to_codec(codec: &mut dyn FrameCodec, settings: &CompressionSettings) -> Result<(), StageError> {
    codec.select_compressor(settings.compressor).map_err(|status| {
        error!(compressor = %settings.compressor, %status, "codec refused compressor");
        StageError::CompressorSelection { compressor: settings.compressor, status }
    })?;
    if codec.threads() != settings.threads {
        codec.set_threads(settings.threads).map_err(|status| {
            error!(threads = settings.threads, %status, "codec refused thread count");
            StageError::Threads { threads: settings.threads, status }
        })?;
    }
    Ok(())
}
