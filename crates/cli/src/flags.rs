use clap::ValueEnum;
use restsum_cache::CacheBackend;
use restsum_catalog::UnknownMethodPolicy;
use restsum_dispatch::BackendKind;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum BackendFlag {
    Gemini,
    Openai,
    Stub,
}

impl BackendFlag {
    pub(crate) const fn as_domain(self) -> BackendKind {
        match self {
            BackendFlag::Gemini => BackendKind::Gemini,
            BackendFlag::Openai => BackendKind::OpenAi,
            BackendFlag::Stub => BackendKind::Stub,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum UnknownMethodsFlag {
    Warn,
    Skip,
    Drop,
}

impl UnknownMethodsFlag {
    pub(crate) const fn as_domain(self) -> UnknownMethodPolicy {
        match self {
            UnknownMethodsFlag::Warn => UnknownMethodPolicy::Warn,
            UnknownMethodsFlag::Skip => UnknownMethodPolicy::Skip,
            UnknownMethodsFlag::Drop => UnknownMethodPolicy::Drop,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum CacheBackendFlag {
    File,
    Memory,
}

impl CacheBackendFlag {
    pub(crate) const fn as_domain(self) -> CacheBackend {
        match self {
            CacheBackendFlag::File => CacheBackend::File,
            CacheBackendFlag::Memory => CacheBackend::Memory,
        }
    }
}
