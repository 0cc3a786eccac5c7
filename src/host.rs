//! Collaborators the loader consumes: input, graphics and audio.
//!
//! The headless implementations here let an image run without a window or
//! an audio device. Graphics and audio entry points resolve to stubs.

use log::trace;
use static_assertions::const_assert_eq;

use crate::abi::stubs::StubKind;
use crate::bridge::pad::PadSample;
use crate::driver::locale::Language;
use crate::driver::touch::{MAX_TOUCHES, TouchFrame};
use crate::symbols::{Origin, SymbolEntry, SymbolProvider};

/// A contact on the touch panel, in panel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

/// Input and locale source for the execution driver.
pub trait Platform: Send {
    fn poll_pad(&mut self) -> PadSample;

    fn poll_touch(&mut self) -> TouchFrame;

    fn language(&self) -> Language;

    /// Factor from panel coordinates to the image's coordinate space.
    fn touch_scale(&self) -> f32 {
        0.5
    }
}

pub trait Graphics: SymbolProvider + Send + Sync {
    /// Late lookup for names the symbol table does not carry, as
    /// `eglGetProcAddress` would.
    fn proc_address(&self, name: &str) -> Option<usize>;

    fn swap_buffers(&self);
}

pub trait Audio: SymbolProvider + Send + Sync {
    fn name(&self) -> &str;
}

/// No input, locale from the environment.
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    language: Language,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self {
            language: Language::from_env(),
        }
    }

    pub fn with_language(language: Language) -> Self {
        Self { language }
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HeadlessPlatform {
    fn poll_pad(&mut self) -> PadSample {
        PadSample::default()
    }

    fn poll_touch(&mut self) -> TouchFrame {
        [None; MAX_TOUCHES]
    }

    fn language(&self) -> Language {
        self.language
    }
}

const GLES2_FUNCTIONS: &[&str] = &[
    "glActiveTexture",
    "glAttachShader",
    "glBindAttribLocation",
    "glBindBuffer",
    "glBindFramebuffer",
    "glBindRenderbuffer",
    "glBindTexture",
    "glBlendColor",
    "glBlendEquation",
    "glBlendEquationSeparate",
    "glBlendFunc",
    "glBlendFuncSeparate",
    "glBufferData",
    "glBufferSubData",
    "glCheckFramebufferStatus",
    "glClear",
    "glClearColor",
    "glClearDepthf",
    "glClearStencil",
    "glColorMask",
    "glCompileShader",
    "glCompressedTexImage2D",
    "glCompressedTexSubImage2D",
    "glCopyTexImage2D",
    "glCopyTexSubImage2D",
    "glCreateProgram",
    "glCreateShader",
    "glCullFace",
    "glDeleteBuffers",
    "glDeleteFramebuffers",
    "glDeleteProgram",
    "glDeleteRenderbuffers",
    "glDeleteShader",
    "glDeleteTextures",
    "glDepthFunc",
    "glDepthMask",
    "glDepthRangef",
    "glDetachShader",
    "glDisable",
    "glDisableVertexAttribArray",
    "glDrawArrays",
    "glDrawElements",
    "glEnable",
    "glEnableVertexAttribArray",
    "glFinish",
    "glFlush",
    "glFramebufferRenderbuffer",
    "glFramebufferTexture2D",
    "glFrontFace",
    "glGenBuffers",
    "glGenFramebuffers",
    "glGenRenderbuffers",
    "glGenTextures",
    "glGenerateMipmap",
    "glGetActiveAttrib",
    "glGetActiveUniform",
    "glGetAttribLocation",
    "glGetBooleanv",
    "glGetError",
    "glGetFloatv",
    "glGetIntegerv",
    "glGetProgramInfoLog",
    "glGetProgramiv",
    "glGetShaderInfoLog",
    "glGetShaderiv",
    "glGetString",
    "glGetUniformLocation",
    "glHint",
    "glIsEnabled",
    "glLineWidth",
    "glLinkProgram",
    "glPixelStorei",
    "glPolygonOffset",
    "glReadPixels",
    "glRenderbufferStorage",
    "glScissor",
    "glShaderSource",
    "glStencilFunc",
    "glStencilFuncSeparate",
    "glStencilMask",
    "glStencilOp",
    "glStencilOpSeparate",
    "glTexImage2D",
    "glTexParameterf",
    "glTexParameteri",
    "glTexSubImage2D",
    "glUniform1f",
    "glUniform1fv",
    "glUniform1i",
    "glUniform1iv",
    "glUniform2fv",
    "glUniform3fv",
    "glUniform4fv",
    "glUniformMatrix3fv",
    "glUniformMatrix4fv",
    "glUseProgram",
    "glValidateProgram",
    "glVertexAttribPointer",
    "glViewport",
];

/// Every GLES2 entry point is the zero stub. Presenting a frame is a no-op.
#[derive(Debug, Default)]
pub struct HeadlessGraphics;

impl SymbolProvider for HeadlessGraphics {
    fn symbols(&self) -> Vec<SymbolEntry> {
        let zero = StubKind::Zero.address();
        GLES2_FUNCTIONS
            .iter()
            .map(|name| SymbolEntry::function(*name, zero, Origin::Graphics))
            .collect()
    }
}

impl Graphics for HeadlessGraphics {
    fn proc_address(&self, name: &str) -> Option<usize> {
        (name.starts_with("gl") || name.starts_with("egl")).then(|| StubKind::Zero.address())
    }

    fn swap_buffers(&self) {
        trace!("swap");
    }
}

const SL_INTERFACES: &[&str] = &[
    "SL_IID_ANDROIDCONFIGURATION",
    "SL_IID_ANDROIDEFFECT",
    "SL_IID_ANDROIDEFFECTCAPABILITIES",
    "SL_IID_ANDROIDEFFECTSEND",
    "SL_IID_ANDROIDSIMPLEBUFFERQUEUE",
    "SL_IID_AUDIODECODERCAPABILITIES",
    "SL_IID_AUDIOENCODER",
    "SL_IID_AUDIOENCODERCAPABILITIES",
    "SL_IID_AUDIOIODEVICECAPABILITIES",
    "SL_IID_BASSBOOST",
    "SL_IID_BUFFERQUEUE",
    "SL_IID_DEVICEVOLUME",
    "SL_IID_DYNAMICINTERFACEMANAGEMENT",
    "SL_IID_DYNAMICSOURCE",
    "SL_IID_EFFECTSEND",
    "SL_IID_ENGINE",
    "SL_IID_ENGINECAPABILITIES",
    "SL_IID_ENVIRONMENTALREVERB",
    "SL_IID_EQUALIZER",
    "SL_IID_LED",
    "SL_IID_METADATAEXTRACTION",
    "SL_IID_METADATATRAVERSAL",
    "SL_IID_MIDIMESSAGE",
    "SL_IID_MIDIMUTESOLO",
    "SL_IID_MIDITEMPO",
    "SL_IID_MIDITIME",
    "SL_IID_MUTESOLO",
    "SL_IID_NULL",
    "SL_IID_OBJECT",
    "SL_IID_OUTPUTMIX",
    "SL_IID_PITCH",
    "SL_IID_PLAY",
    "SL_IID_PLAYBACKRATE",
    "SL_IID_PREFETCHSTATUS",
    "SL_IID_PRESETREVERB",
    "SL_IID_RATEPITCH",
    "SL_IID_RECORD",
    "SL_IID_SEEK",
    "SL_IID_THREADSYNC",
    "SL_IID_VIBRA",
    "SL_IID_VIRTUALIZER",
    "SL_IID_VISUALIZATION",
    "SL_IID_VOLUME",
];

const SL_INTERFACE_COUNT: usize = 43;
const_assert_eq!(SL_INTERFACES.len(), SL_INTERFACE_COUNT);

const VORBIS_FUNCTIONS: &[&str] = &[
    "ov_clear",
    "ov_open_callbacks",
    "ov_pcm_total",
    "ov_raw_seek",
    "ov_read",
    "ov_info",
    "ov_time_total",
];

/// `SLInterfaceID_`: an opaque 16-byte GUID.
#[derive(Debug)]
#[repr(C)]
pub struct InterfaceId([u32; 4]);

const fn interface_ids() -> [InterfaceId; SL_INTERFACE_COUNT] {
    let mut ids = [const { InterfaceId([0; 4]) }; SL_INTERFACE_COUNT];
    let mut index = 0;
    while index < SL_INTERFACE_COUNT {
        ids[index] = InterfaceId([index as u32 + 1, 0x534c_4949, 0, 0]);
        index += 1;
    }
    ids
}

static INTERFACE_IDS: [InterfaceId; SL_INTERFACE_COUNT] = interface_ids();

/// The `SL_IID_*` symbols are `const SLInterfaceID` variables, pointers to
/// the ids above.
#[repr(transparent)]
struct InterfacePointers([*const InterfaceId; SL_INTERFACE_COUNT]);

unsafe impl Sync for InterfacePointers {}

const fn interface_pointers(ids: &'static [InterfaceId; SL_INTERFACE_COUNT]) -> InterfacePointers {
    let mut pointers = [std::ptr::null(); SL_INTERFACE_COUNT];
    let mut index = 0;
    while index < SL_INTERFACE_COUNT {
        pointers[index] = &ids[index] as *const InterfaceId;
        index += 1;
    }
    InterfacePointers(pointers)
}

static INTERFACE_POINTERS: InterfacePointers = interface_pointers(&INTERFACE_IDS);

/// OpenSL ES refuses to create an engine and Vorbis decoding faults, so
/// the image runs without sound.
#[derive(Debug, Default)]
pub struct NullAudio;

impl SymbolProvider for NullAudio {
    fn symbols(&self) -> Vec<SymbolEntry> {
        let mut entries = vec![SymbolEntry::function(
            "slCreateEngine",
            StubKind::SlFeatureUnsupported.address(),
            Origin::Audio,
        )];
        entries.extend(SL_INTERFACES.iter().zip(INTERFACE_POINTERS.0.iter()).map(|(name, pointer)| {
            SymbolEntry::data(*name, pointer as *const *const InterfaceId as usize, Origin::Audio)
        }));
        let fault = StubKind::VorbisFault.address();
        entries.extend(
            VORBIS_FUNCTIONS
                .iter()
                .map(|name| SymbolEntry::function(*name, fault, Origin::Audio)),
        );
        entries
    }
}

impl Audio for NullAudio {
    fn name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn interface_ids_are_distinct_pointers_to_distinct_ids() {
        let entries = NullAudio.symbols();
        let ids: Vec<_> = entries.iter().filter(|e| e.name.starts_with("SL_IID_")).collect();
        assert_eq!(ids.len(), SL_INTERFACE_COUNT);

        let targets: HashSet<usize> = ids
            .iter()
            .map(|entry| unsafe { *(entry.address as *const usize) })
            .collect();
        assert_eq!(targets.len(), SL_INTERFACE_COUNT);
        assert!(!targets.contains(&0));
    }

    #[test]
    fn engine_creation_reports_unsupported() {
        let entries = NullAudio.symbols();
        let engine = entries.iter().find(|e| e.name == "slCreateEngine").expect("slCreateEngine");
        let create: extern "C" fn() -> isize = unsafe { std::mem::transmute(engine.address) };
        assert_eq!(create(), StubKind::SlFeatureUnsupported.value());
    }

    #[test]
    fn headless_graphics_answers_late_lookups() {
        let graphics = HeadlessGraphics;
        assert_eq!(graphics.proc_address("glDrawElementsInstanced"), Some(StubKind::Zero.address()));
        assert_eq!(graphics.proc_address("vkCreateInstance"), None);
        assert!(graphics.symbols().iter().all(|e| e.origin == Origin::Graphics));
    }
}
