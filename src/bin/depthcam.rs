//! depthcam - stereo depth camera recorder and detection viewer.

fn main() {
    if let Err(err) = depthcam::cli::run() {
        log::error!("{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
