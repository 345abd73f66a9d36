//! Fixtures shared by the step and engine tests.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lunapatch_core::{FixedResolver, Options, OptionsRequest, Step, TargetLayout, APP_ASAR};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::actions::StepContext;
use crate::events::RecordingSink;
use crate::paths::InstallPaths;

/// A temporary TIDAL resources directory plus work directory.
pub struct Harness {
    pub temp: TempDir,
    pub resources: PathBuf,
    pub paths: InstallPaths,
    pub sink: RecordingSink,
    pub options: Options,
}

impl Harness {
    pub fn install(download_url: &str) -> Self {
        Self::with_request(OptionsRequest::install(download_url))
    }

    pub fn uninstall() -> Self {
        Self::with_request(OptionsRequest::uninstall())
    }

    fn with_request(request: OptionsRequest) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let resources = temp.path().join("resources");
        fs::create_dir_all(&resources).expect("resources dir");
        fs::write(resources.join(APP_ASAR), b"pristine asar").expect("app.asar");
        let paths = InstallPaths::new(temp.path().join("work"), Arc::new(FixedResolver::not_found()));
        let options = request
            .with_overwrite_path(resources.display().to_string())
            .validate()
            .expect("options");
        Self {
            temp,
            resources,
            paths,
            sink: RecordingSink::new(),
            options,
        }
    }

    pub fn ctx(&self, step: Step) -> StepContext<'_> {
        StepContext {
            step,
            options: &self.options,
            paths: &self.paths,
            sink: &self.sink,
            download_timeout: Duration::from_secs(5),
        }
    }

    pub fn layout(&self) -> TargetLayout {
        TargetLayout::new(&self.resources)
    }

    /// Drops the overwrite path so the (not found) resolver decides.
    pub fn without_target(mut self) -> Self {
        self.options.overwrite_path = None;
        self
    }
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add dir");
        } else {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(contents).expect("write entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Serves one HTTP response on a loopback port and returns its URL.
pub fn serve_once(status_line: &str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let status_line = status_line.to_string();
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(read) => request.extend_from_slice(&buf[..read]),
            }
        }
        let header = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status_line,
            body.len()
        );
        let _ = stream.write_all(header.as_bytes());
        let _ = stream.write_all(&body);
        let _ = stream.flush();
    });
    format!("http://{}/luna.zip", addr)
}
