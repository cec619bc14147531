// 构建脚本: 启用 ffmpeg 特性时链接FFmpeg依赖库
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // 仅在Windows MSVC环境下、且启用了 ffmpeg 特性时添加FFmpeg相关库
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        if std::env::var_os("CARGO_FEATURE_FFMPEG").is_some() {
            // Intel QSV (Quick Sync Video) 硬件加速
            println!("cargo:rustc-link-lib=dylib=libmfx");

            // OLE 自动化和VFW (dshow 摄像头输入)
            println!("cargo:rustc-link-lib=dylib=oleaut32");
            println!("cargo:rustc-link-lib=dylib=vfw32");

            // Secure Channel (TLS/SSL, rtsps)
            println!("cargo:rustc-link-lib=dylib=secur32");
        }
    }
}
