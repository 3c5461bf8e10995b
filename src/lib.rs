/// 触摸事件的抽象层，定义归一化的手指事件模型
pub mod event_model;

/// evdev 原始记录解码与多点触控 slot 跟踪
pub mod touch_driver;

/// 输入源实现（evdev 设备、wayland 原生事件、脚本模拟）
pub mod input_devices;

/// 事件队列，以及把队列里的事件送进手势状态机的消费端
pub mod event_router;

/// 手势识别状态机
pub mod gesture;

/// 手势回调，对外分发识别结果
pub mod event_dispatcher;

/// 运行时计数器，仅用于诊断
pub mod statistics;

/// TOML 配置
pub mod config;

// 数据流是单向的:
// 硬件/系统 -> `touch_driver` (只有 evdev 后端需要) -> `event_model` 里的归一化事件
// -> `event_router` 的队列 -> `gesture` -> `event_dispatcher` 的回调 -> UI

// `input_devices` 里每个后端最多只有一个读线程(evdev)，wayland 和 mock 后端都由 UI 线程轮询
// 手势状态只在 UI 线程里被修改，队列是唯一跨线程共享的东西

// 坐标全部在 [0, 1] 的归一化空间里处理，设备原始坐标范围只用来打日志
